// Integration tests for archive processing and the deployable container, compiled into the single `tests` binary.
mod container;
mod processor;
