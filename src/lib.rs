pub mod classifier;
pub mod config;
pub mod control_loop;
pub mod dataset;
pub mod dispatch;
pub mod emg_window;
pub mod frame_buffer;
pub mod knn;
pub mod logger;
pub mod operator;
pub mod orientation;
pub mod osc;
pub mod sensor;
pub mod session_log;
pub mod simulator;
pub mod training;
pub mod types;
