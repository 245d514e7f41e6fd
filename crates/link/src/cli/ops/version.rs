use std::convert::Infallible;

use clap::Args;

use dslink::config::PROTOCOL_VERSION;

#[derive(Args, Debug, Clone)]
pub struct Version;

#[async_trait::async_trait]
impl crate::cli::op::Op for Version {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(format!(
            "dslink {} (handshake protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION
        ))
    }
}
