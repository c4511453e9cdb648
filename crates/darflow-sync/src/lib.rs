//! Sync layer: Google Sheets as the shared tracker store, Google Drive for
//! period folders and uploaded DARs.

#[cfg(feature = "http")]
pub mod drive;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod sheets;

#[cfg(feature = "http")]
pub use drive::{DriveClient, DriveFile};
#[cfg(feature = "http")]
pub use http::{GoogleAuth, SyncError};
#[cfg(feature = "http")]
pub use sheets::SheetsClient;
