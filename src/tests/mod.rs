mod keys_tests;
mod operation_tests;
