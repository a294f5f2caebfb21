use url::Url;

use pokr_common::room_code::RoomCode;

const ROOM_PARAM: &str = "room";
/// Base for bare `?room=...` links.
const LOCAL_BASE: &str = "pokr://local/";

/// The client's shareable location, the terminal stand-in for a browser address bar.
///
/// Outside a room it is the bare base (`pokr://host/`); inside a room it carries
/// the code as a query parameter (`pokr://host/?room=AB12CD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base: Url,
    room: Option<RoomCode>,
}

impl Location {
    pub fn new(server: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!("pokr://{}/", server.trim_end_matches('/')))?;
        Ok(Self { base, room: None })
    }

    pub fn enter(&mut self, code: &RoomCode) {
        self.room = Some(code.clone());
    }

    pub fn clear(&mut self) {
        self.room = None;
    }

    pub fn href(&self) -> String {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Some(code) = &self.room {
            url.query_pairs_mut().append_pair(ROOM_PARAM, code.as_str());
        }
        url.to_string()
    }
}

/// Extract the `room` query parameter from a share link, uppercased.
///
/// Accepts full links as well as a bare `?room=...` query string.
pub fn room_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    let url = Url::parse(link)
        .or_else(|_| Url::parse(LOCAL_BASE).and_then(|base| base.join(link)))
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == ROOM_PARAM)
        .map(|(_, value)| value.trim().to_ascii_uppercase())
        .filter(|value| !value.is_empty())
}
