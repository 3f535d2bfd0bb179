//! Packet data (GPRS) context management
//!
//! Only context definition and the `ATD*99#` dial are covered; the PPP
//! session that follows `CONNECT` is left to the caller.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::Result;
use crate::modem::{GsmModem, WriteOptions};
use crate::util::all_lines_matching;

/// PDP context definition (`AT+CGDCONT`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdpContext {
    /// Context identifier
    pub cid: u32,
    /// `IP`, `IPV6`, `PPP`, ...
    pub pdp_type: String,
    pub apn: String,
    /// Static address; empty requests a dynamic one
    pub pdp_address: String,
    pub data_compression: u8,
    pub header_compression: u8,
}

impl PdpContext {
    /// IP context for `apn` with a dynamic address and no compression
    pub fn ip(cid: u32, apn: impl Into<String>) -> Self {
        Self {
            cid,
            pdp_type: "IP".to_string(),
            apn: apn.into(),
            pdp_address: String::new(),
            data_compression: 0,
            header_compression: 0,
        }
    }

    fn to_command(&self) -> String {
        format!(
            "AT+CGDCONT={},\"{}\",\"{}\",\"{}\",{},{}",
            self.cid, self.pdp_type, self.apn, self.pdp_address, self.data_compression, self.header_compression
        )
    }
}

impl GsmModem {
    /// Currently defined PDP contexts
    #[instrument(skip(self))]
    pub async fn pdp_contexts(&self) -> Result<Vec<PdpContext>> {
        let lines = self.write("AT+CGDCONT?").await?;
        Ok(all_lines_matching(&self.inner.patterns.cgdcont, &lines)
            .into_iter()
            .map(|caps| PdpContext {
                cid: caps[1].parse().unwrap_or(0),
                pdp_type: caps[2].to_string(),
                apn: caps[3].to_string(),
                pdp_address: caps[4].to_string(),
                data_compression: caps[5].parse().unwrap_or(0),
                header_compression: caps[6].parse().unwrap_or(0),
            })
            .collect())
    }

    /// First defined PDP context, if any
    pub async fn default_pdp_context(&self) -> Result<Option<PdpContext>> {
        Ok(self.pdp_contexts().await?.into_iter().next())
    }

    /// Define a PDP context, replacing any existing one with the same id
    #[instrument(skip(self))]
    pub async fn define_pdp_context(&self, context: &PdpContext) -> Result<()> {
        self.write(&context.to_command()).await?;
        Ok(())
    }

    /// Dial the packet data service on context `cid` and wait for `CONNECT`.
    ///
    /// After this returns the serial line carries PPP, not AT commands.
    #[instrument(skip(self))]
    pub async fn init_data_connection(&self, cid: u32) -> Result<()> {
        self.write_with(&format!("ATD*99***{}#", cid), WriteOptions::default().expect("CONNECT\r"))
            .await?;
        info!(cid, "Data connection open");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::Patterns;

    #[test]
    fn test_define_command() {
        let context = PdpContext::ip(1, "internet");
        assert_eq!(context.to_command(), "AT+CGDCONT=1,\"IP\",\"internet\",\"\",0,0");
    }

    #[test]
    fn test_cgdcont_pattern() {
        let p = Patterns::new();
        let caps = p
            .cgdcont
            .captures("+CGDCONT: 1,\"IP\",\"internet\",\"0.0.0.0\",0,0")
            .unwrap();
        assert_eq!(&caps[3], "internet");
        assert_eq!(&caps[4], "0.0.0.0");
        assert!(p.cgdcont.is_match("+CGDCONT: 2,\"IP\",\"\",\"\",0,0"));
    }
}
