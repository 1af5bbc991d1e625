// JSON-RPC method names spoken by the signal-cli daemon.

pub const JSONRPC_VERSION: &str = "2.0";

// inbound
pub const RECEIVE: &str = "receive";

// outbound
pub const SEND: &str = "send";
