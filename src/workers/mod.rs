mod transmission_cleanup;
mod upload_sweep;

pub use transmission_cleanup::TransmissionCleanupWorker;
pub use upload_sweep::UploadSweepWorker;
