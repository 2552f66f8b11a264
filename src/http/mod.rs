//! HTTP protocol implementation.
//!
//! A small HTTP/1.x server side: enough to parse requests, write responses
//! and push file bodies through the kernel without copying them.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection request loop with keep-alive and idle timeout
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: HTTP request representation and parsing utilities
//! - **`response`**: Status codes and buffered responses for handlers
//! - **`writer`**: Writes a response head, body and file chunks; ends the response
//! - **`transport`**: The socket abstraction, including the zero-copy file transfer
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received          Malformed ──→ Rejecting (400) ──→ Closed
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Handlers, then the file streamer
//!        └──────┬───────────┘
//!               │ Response finished
//!               ├─ Reusable + keep-alive → Reading (same connection)
//!               └─ Otherwise, or timed out → Closed
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod transport;
pub mod writer;
