pub mod test_reporter;
