use std::collections::BTreeSet;

pub trait GetYear {
    fn get_year(&self) -> i32;
}

pub trait CheckYearsExt {
    fn get_first_year(&self) -> Option<i32>;
    fn check_years(&self, year: i32) -> Result<(), BTreeSet<i32>>;
}

/// Blanket implementation for every slice whose items implement `GetYear`.
impl<T> CheckYearsExt for [T]
where
    T: GetYear,
{
    fn get_first_year(&self) -> Option<i32> {
        self.iter().map(|item| item.get_year()).min()
    }

    fn check_years(&self, year: i32) -> Result<(), BTreeSet<i32>> {
        let others: BTreeSet<_> = self
            .iter()
            .filter_map(|item| {
                let item_year = item.get_year();

                (item_year != year).then_some(item_year)
            })
            .collect();

        if others.is_empty() {
            Ok(())
        } else {
            Err(others)
        }
    }
}
