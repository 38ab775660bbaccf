use rocket::{
    Outcome, State,
    http::Status,
    request::{self, FromRequest, Request},
};

use crate::config::AppConfig;


/// Private cookie written by the identity service, which shares our secret key.
pub const USER_COOKIE: &'static str = "user_id";
pub const ADMIN_HEADER: &'static str = "X-Admin-Token";


/// The signed-in identity, if any. Never rejects a request.
pub struct SessionUser(pub Option<String>);

impl<'a, 'r> FromRequest<'a, 'r> for SessionUser {
    type Error = ();

    fn from_request(request: &'a Request<'r>) -> request::Outcome<Self, ()> {
        let user_id = request.cookies()
            .get_private(USER_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|id| !id.is_empty());

        Outcome::Success(SessionUser(user_id))
    }
}


/// Present only when the admin token header matches the configured token.
pub struct Admin;

impl<'a, 'r> FromRequest<'a, 'r> for Admin {
    type Error = ();

    fn from_request(request: &'a Request<'r>) -> request::Outcome<Self, ()> {
        let config = match request.guard::<State<AppConfig>>() {
            Outcome::Success(config) => config,
            _ => return Outcome::Failure((Status::InternalServerError, ())),
        };

        let expected = match config.admin_token {
            Some(ref token) => token,
            None => return Outcome::Failure((Status::Forbidden, ())),
        };

        match request.headers().get_one(ADMIN_HEADER) {
            Some(given) if given == expected.as_str() => Outcome::Success(Admin),
            _ => {
                warn!("Rejected admin request to {}", request.uri());
                Outcome::Failure((Status::Unauthorized, ()))
            },
        }
    }
}
