pub mod read_receipt;
