use std::collections::HashMap;

/// Maps a withdrawal destination (an address or a label) to the account that owns it.
pub trait AddressResolver {
    fn resolve(&self, address: &str) -> Option<&str>;
}

impl<T: AddressResolver + ?Sized> AddressResolver for &T {
    fn resolve(&self, address: &str) -> Option<&str> {
        (**self).resolve(address)
    }
}

impl AddressResolver for HashMap<String, String> {
    fn resolve(&self, address: &str) -> Option<&str> {
        self.get(address).map(String::as_str)
    }
}

/// Known withdrawal destinations.
#[derive(Clone, Debug, Default)]
pub struct AddressBook {
    accounts: HashMap<String, String>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previously registered account when the address was already known.
    pub fn insert(
        &mut self,
        address: impl Into<String>,
        account: impl Into<String>,
    ) -> Option<String> {
        self.accounts.insert(address.into(), account.into())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl<A: Into<String>, B: Into<String>> FromIterator<(A, B)> for AddressBook {
    fn from_iter<T: IntoIterator<Item = (A, B)>>(iter: T) -> Self {
        let mut book = Self::new();
        book.extend(iter);
        book
    }
}

impl<A: Into<String>, B: Into<String>> Extend<(A, B)> for AddressBook {
    fn extend<T: IntoIterator<Item = (A, B)>>(&mut self, iter: T) {
        for (address, account) in iter {
            self.insert(address, account);
        }
    }
}

impl AddressResolver for AddressBook {
    fn resolve(&self, address: &str) -> Option<&str> {
        self.accounts.resolve(address.trim())
    }
}
