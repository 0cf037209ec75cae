use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::Status;
use bytes::Bytes;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Per-request state threaded through middleware and handlers.
///
/// `status`, `reply` and `cookies` are committed onto the response once the
/// handler chain completes, unless the chain already wrote to the response
/// itself. Application data rides along in the typed extension map.
#[derive(Debug)]
pub struct Context {
    pub status: Option<u16>,
    pub reply: Option<Bytes>,
    /// Raw `Set-Cookie` values, in the order they were added.
    pub cookies: Vec<String>,
    request: Request,
    response: Response,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new(request: Request, response: Response) -> Context {
        Context {
            status: None,
            reply: None,
            cookies: Vec::new(),
            request,
            response,
            extensions: HashMap::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.request.get_header(k)
    }

    pub fn set_reply(&mut self, reply: impl Into<Bytes>) {
        self.reply = Some(reply.into());
    }

    pub fn add_cookie(&mut self, cookie: impl Into<String>) {
        self.cookies.push(cookie.into());
    }

    /// Status the listener commits: unset and `0` both mean `200`.
    pub fn committed_status(&self) -> u16 {
        self.status
            .filter(|code| *code != 0)
            .unwrap_or(Status::OK.code())
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast().ok().map(|b| *b))
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok().map(|b| *b))
    }
}
