//! End-to-end tests: real HTTP through `HyperTransport` against a wiremock server.
