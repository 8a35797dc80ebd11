/// Row counters collected while importing.
#[derive(Debug, Default)]
pub struct Stats {
    n_transaction_rows: i32,
    n_address_rows: i32,
    n_duplicate_addresses: i32,
}

impl Stats {
    pub fn inc_transactions(&mut self) {
        self.n_transaction_rows += 1;
    }

    pub fn inc_addresses(&mut self) {
        self.n_address_rows += 1;
    }

    pub fn inc_duplicate_addresses(&mut self) {
        self.n_duplicate_addresses += 1;
    }

    pub fn transactions(&self) -> i32 {
        self.n_transaction_rows
    }

    pub fn addresses(&self) -> i32 {
        self.n_address_rows
    }

    pub fn pretty_print(&self) {
        println!("{self:#?}");
        println!();
    }
}
