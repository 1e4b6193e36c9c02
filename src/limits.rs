/// Staff, product and customer name length.
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_STAFF_PER_ACCOUNT: usize = 1_000;
pub const MAX_PRODUCTS_PER_ACCOUNT: usize = 10_000;
pub const MAX_RESERVATIONS_PER_DAY: usize = 10_000;
pub const MAX_PARTY_SIZE: u32 = 1_000;
pub const MAX_CONTACTS_PER_ACCOUNT: usize = 1_000_000;
pub const MAX_APPOINTMENTS_PER_ACCOUNT: usize = 100_000;
pub const MAX_SYNC_BATCH: usize = 1_000;
/// Oldest notifications are dropped beyond this.
pub const MAX_NOTIFICATIONS_KEPT: usize = 500;

/// Contact import insert batch.
pub const IMPORT_BATCH_SIZE: usize = 100;
/// Contacts returned by one listing.
pub const CONTACT_PAGE_SIZE: usize = 100;

pub const MAX_TENANTS: usize = 10_000;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;
