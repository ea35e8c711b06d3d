mod basic_test;
mod utils;
