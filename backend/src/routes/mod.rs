/// Router Module Index
///
/// Splits each service's routes by the access they require. The gate is applied to a
/// whole router as a route layer, so no handler in a protected module can be reached
/// without a validated token.

/// Routes open to anonymous clients: banner, health, login and registration.
pub mod public;

/// User-service routes behind the gate with no role requirement.
pub mod authenticated;

/// Admin-service routes behind the gate requiring `Role::Admin`.
pub mod admin;
