pub mod send_service;
