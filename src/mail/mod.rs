pub mod decoders;
pub mod diagnostics;
pub mod imap_client;
pub mod normalize;
