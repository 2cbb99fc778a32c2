pub mod calibration;
pub mod histogram;
pub mod line_report;
pub mod line_scanner;
pub mod pixel_grid;
pub mod scan_parameters;
pub mod sem_metadata;
