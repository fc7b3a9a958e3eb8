pub mod image_jobs;
