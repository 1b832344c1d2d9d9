pub(crate) const CHARLIE: &str = "charlie.brown";
pub(crate) const LUCY: &str = "lucy.vanpelt";
pub(crate) const LINUS: &str = "linus.vanpelt";
pub(crate) const SCHROEDER: &str = "schroeder";

pub(crate) const ADMIN_ROLE: &str = "r.peanuts.admin";
pub(crate) const ISSUER_ROLE: &str = "r.peanuts.issuer";
pub(crate) const READER_ROLE: &str = "r.peanuts.reader";

pub(crate) const TEST_CA_ID: &str = "peanuts.root.ca";
pub(crate) const TEST_PASSPHRASE: &str = "Snoopy#Woodstock50";

/// First serial number handed out by the counting random source.
pub(crate) const FIRST_SERIAL: i64 = 1_000;
