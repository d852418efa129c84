mod helpers;

mod mem_store_tests;
mod read_tests;
