// Integration tests for archives and class loaders, compiled into the single `tests` binary.
mod class_loading;
mod resource_order;
