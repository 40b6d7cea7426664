// Integration tests for the naming tree, compiled into the single `tests` binary.
mod enc_access;
mod naming_tree;
mod parsed_name_props;
