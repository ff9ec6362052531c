//! Camera records and connection details.

use serde::{Deserialize, Serialize};

use crate::roi::RoiConfig;

/// The connection triple for an RTSP/RTSPS source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConnection {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl CameraConnection {
    /// Primary URL shape: secure RTP over TLS.
    pub fn rtsps_url(&self) -> String {
        format!(
            "rtsps://{}:{}/{}?enableSrtp",
            self.host, self.port, self.token
        )
    }

    /// Fallback URL shape: plain RTSP, offset six ports up.
    pub fn rtsp_fallback_url(&self) -> String {
        format!(
            "rtsp://{}:{}/{}",
            self.host,
            self.port.saturating_add(6),
            self.token
        )
    }
}

/// One monitored camera, as loaded from `cctv_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: i32,
    pub name: String,
    pub connection: CameraConnection,
    pub location: Option<String>,
    pub enabled: bool,
    pub roi: RoiConfig,
}

impl Camera {
    pub fn location_label(&self) -> &str {
        self.location.as_deref().unwrap_or("Unknown Location")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_shapes() {
        let conn = CameraConnection {
            host: "192.168.199.9".into(),
            port: 7441,
            token: "sKDBmnGEmed2VzuM".into(),
        };
        assert_eq!(
            conn.rtsps_url(),
            "rtsps://192.168.199.9:7441/sKDBmnGEmed2VzuM?enableSrtp"
        );
        assert_eq!(
            conn.rtsp_fallback_url(),
            "rtsp://192.168.199.9:7447/sKDBmnGEmed2VzuM"
        );
    }
}
