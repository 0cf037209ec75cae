use strum::{FromRepr, IntoStaticStr};

#[derive(FromRepr, IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum Status {
    #[strum(serialize = "OK")]
    OK = 200,
    #[strum(serialize = "Created")]
    CREATED = 201,
    #[strum(serialize = "No Content")]
    NO_CONTENT = 204,
    #[strum(serialize = "Moved Permanently")]
    MOVED_PERMANENTLY = 301,
    #[strum(serialize = "Found")]
    FOUND = 302,
    #[strum(serialize = "Not Modified")]
    NOT_MODIFIED = 304,
    #[strum(serialize = "Bad Request")]
    BAD_REQUEST = 400,
    #[strum(serialize = "Unauthorized")]
    UNAUTHORIZED = 401,
    #[strum(serialize = "Forbidden")]
    FORBIDDEN = 403,
    #[strum(serialize = "Not Found")]
    NOT_FOUND = 404,
    #[strum(serialize = "Method Not Allowed")]
    METHOD_NOT_ALLOWED = 405,
    #[strum(serialize = "Payload Too Large")]
    PAYLOAD_TOO_LARGE = 413,
    #[strum(serialize = "Internal Server Error")]
    INTERNAL_SERVER_ERROR = 500,
    #[strum(serialize = "Service Unavailable")]
    SERVICE_UNAVAILABLE = 503,
}

impl Status {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        self.into()
    }

    /// Reason phrase for the status line. Unknown codes get an empty phrase,
    /// which HTTP/1.1 permits.
    pub fn reason_phrase(code: u16) -> &'static str {
        Status::from_repr(code).map(Status::message).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn reason_phrases() {
        assert_eq!(Status::reason_phrase(200), "OK");
        assert_eq!(Status::reason_phrase(413), "Payload Too Large");
        assert_eq!(Status::reason_phrase(299), "");
        assert_eq!(Status::NOT_FOUND.code(), 404);
    }
}
