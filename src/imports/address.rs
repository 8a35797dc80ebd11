use crate::imports::ImportError;
use crate::model::{AddressBook, Stats};
use serde::Deserialize;
use std::{io::Read, path::Path};
use tracing::{debug, trace, warn};

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AddressCSVRow {
    pub(crate) address: String,
    pub(crate) account: String,
}

/// Read an `address,account` CSV file into `book`.
pub fn read_address_book(
    s: &mut Stats,
    book: &mut AddressBook,
    path: impl AsRef<Path>,
) -> Result<(), ImportError> {
    let path = path.as_ref();
    debug!("Parsing addresses from {path:?}");

    read_addresses_into(s, book, std::fs::File::open(path)?)
}

/// Add every row to `book`. A repeated address is reassigned to the account on the latest row.
pub fn read_addresses_into<R: Read>(
    s: &mut Stats,
    book: &mut AddressBook,
    reader: R,
) -> Result<(), ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    for result in reader.deserialize() {
        let row: AddressCSVRow = result?;
        trace!("Deserialized: {row:?}");

        let address = row.address.clone();
        if let Some(previous) = book.insert(row.address, row.account.as_str()) {
            if previous != row.account {
                warn!(
                    "Address `{address}` moved from account `{previous}` to `{}`",
                    row.account
                );
            }
            s.inc_duplicate_addresses();
        }
        s.inc_addresses();
    }

    Ok(())
}
