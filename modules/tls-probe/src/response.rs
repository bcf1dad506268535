use crate::TransportError;

/// Status line and the one header we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub location: Option<String>,
}

impl ResponseHead {
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        let mut lines = text.lines();
        let first = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| TransportError::MalformedResponse("empty response".into()))?;
        let mut parts = first.split_whitespace();
        let proto = parts.next().unwrap_or("");
        if !proto.starts_with("HTTP/") {
            return Err(TransportError::MalformedResponse(format!("bad status line {:?}", first)));
        }
        let status: u16 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TransportError::MalformedResponse(format!("bad status line {:?}", first)))?;

        let mut location = None;
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("location") {
                    location = Some(value.trim().to_string());
                }
            }
        }
        Ok(ResponseHead { status, location })
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}
