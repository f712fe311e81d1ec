// External collaborators: where frames come from and how poses are detected

pub mod capture;
pub mod pose;
