//! Profile photo lifecycle: validate the upload, derive correlated
//! filenames, render the stored variants, stage them in object storage and
//! only then commit the references to the user record.

pub mod derive;
pub mod names;
pub mod service;
pub mod upload;
