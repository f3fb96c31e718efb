pub mod deployment_window;
