use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::error::GatewayError;

const SCHEME: &str = "upi://pay?";
const CURRENCY: &str = "INR";

/// Query parameters of a UPI deep link, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpiUri {
    /// Payee address.
    pub pa: String,
    /// Payee name.
    pub pn: String,
    /// Amount, two decimals.
    pub am: String,
    pub cu: String,
    /// Note shown to the payer.
    pub tn: String,
    /// Transaction reference (order id).
    pub tr: String,
}

impl UpiUri {
    pub fn new(upi_id: &str, payee_name: &str, amount: f64, message: &str, order_id: &str) -> Self {
        Self {
            pa: upi_id.to_string(),
            pn: payee_name.to_string(),
            am: format!("{:.2}", amount),
            cu: CURRENCY.to_string(),
            tn: message.to_string(),
            tr: order_id.to_string(),
        }
    }

    /// Render as `upi://pay?...` with every value percent-encoded.
    pub fn build(&self) -> Result<String, GatewayError> {
        let query = serde_urlencoded::to_string(self)
            .map_err(|e| GatewayError::Render(anyhow::Error::new(e)))?;
        // Form encoding writes spaces as '+'; UPI apps expect %20. A literal
        // '+' in the input has already become %2B.
        Ok(format!("{}{}", SCHEME, query.replace('+', "%20")))
    }

    pub fn parse(uri: &str) -> Result<Self, GatewayError> {
        let query = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| GatewayError::validation("Not a upi://pay URI"))?;
        serde_urlencoded::from_str(query)
            .map_err(|e| GatewayError::validation(format!("Malformed UPI URI: {}", e)))
    }

    pub fn amount(&self) -> Result<f64, GatewayError> {
        self.am
            .parse()
            .map_err(|_| GatewayError::validation(format!("Malformed UPI amount: {}", self.am)))
    }
}

/// Turns a payload string into an image.
pub trait QrRenderer: Send + Sync {
    fn render_png(&self, payload: &str) -> Result<Vec<u8>>;
}

/// PNG renderer backed by `qrcode` + `image`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngQrRenderer;

impl QrRenderer for PngQrRenderer {
    fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        let code = QrCode::new(payload.as_bytes())?;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(250, 250)
            .build();

        let dynamic_image = DynamicImage::ImageLuma8(image);
        let mut buffer = Cursor::new(Vec::new());
        dynamic_image.write_to(&mut buffer, image::ImageOutputFormat::Png)?;

        Ok(buffer.into_inner())
    }
}

/// Render `payload` and return the PNG as standard base64.
pub fn render_qr_base64(renderer: &dyn QrRenderer, payload: &str) -> Result<String, GatewayError> {
    let png = renderer.render_png(payload).map_err(GatewayError::Render)?;
    Ok(general_purpose::STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_is_deterministic_and_percent_encoded() {
        let uri = UpiUri::new("a@b", "BharatPay_Merchant", 100.0, "Tea & snacks", "ORD 1")
            .build()
            .unwrap();

        assert_eq!(
            uri,
            "upi://pay?pa=a%40b&pn=BharatPay_Merchant&am=100.00&cu=INR&tn=Tea%20%26%20snacks&tr=ORD%201"
        );
    }

    #[test]
    fn parse_inverts_build() {
        let original = UpiUri::new("shop+1@okbank", "Shop", 49.5, "50% off + tax", "ORD_9");
        let parsed = UpiUri::parse(&original.build().unwrap()).unwrap();

        assert_eq!(parsed, original);
        assert_eq!(parsed.amount().unwrap(), 49.5);
        assert_eq!(parsed.pa, "shop+1@okbank");
    }

    #[test]
    fn parse_rejects_other_schemes() {
        assert!(matches!(
            UpiUri::parse("https://example.com/?pa=a@b"),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn png_renderer_emits_png() {
        let png = PngQrRenderer.render_png("upi://pay?pa=a%40b").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    struct BrokenRenderer;

    impl QrRenderer for BrokenRenderer {
        fn render_png(&self, _payload: &str) -> Result<Vec<u8>> {
            anyhow::bail!("renderer offline")
        }
    }

    #[test]
    fn renderer_failure_is_a_render_error() {
        assert!(matches!(
            render_qr_base64(&BrokenRenderer, "x"),
            Err(GatewayError::Render(_))
        ));
    }
}
