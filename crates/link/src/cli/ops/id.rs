use clap::Args;

use common::crypto::StoreError;

/// Print the dsId this key produces for a link name
#[derive(Args, Debug, Clone)]
pub struct Id {
    /// Link name used as the dsId prefix
    #[arg(long)]
    pub name: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Id {
    type Error = StoreError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let key = ctx.key_store.load()?;
        Ok(key.ds_id(&self.name))
    }
}
