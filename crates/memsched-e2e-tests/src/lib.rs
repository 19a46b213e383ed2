//! End-to-end tests for memsched live under `tests/`.
