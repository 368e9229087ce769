mod common;

mod shutdown_tests;
