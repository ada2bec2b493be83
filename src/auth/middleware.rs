pub mod bearer;
pub mod protected_route;
