mod read_receipt;
