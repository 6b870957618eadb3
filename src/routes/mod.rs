//! Router Module Index
//!
//! Splits the gateway's own endpoints by tier and assembles the standard route
//! table. Access control is decided by the table, never inside the handlers.

use axum::Router;

use crate::{
    AppState,
    roles::{Role, RoleSet},
    route_table::{RouteTable, RouteTableError, merge_checked},
};

/// Endpoints reachable without an identity (`/`, `/health`, `/api/events`).
pub mod public;

/// The employee prefix: the public login carve-out and the staff-only routes.
pub mod employee;

/// Routes restricted to the admin role.
pub mod admin;

/// Roles admitted under `/api/employee`.
pub const STAFF_ROLES: RoleSet = RoleSet::of(&[Role::Admin, Role::Associate, Role::Cashier]);

/// Roles admitted under `/api/admin`.
pub const ADMIN_ROLES: RoleSet = RoleSet::of(&[Role::Admin]);

/// RouteGroups
///
/// The eight business handler groups, supplied by whoever composes the gateway.
/// Each is mounted under its own `/api/<group>` prefix; any left at the default is
/// an empty group, so every path under it ends in the 404 handler.
///
/// `employee` and `admin` are merged with the gateway's built-in routes for those
/// prefixes. Redefining one of them (`POST /login`, `GET /me`, `GET /employees`,
/// `POST /notifications`) is a `RouteTableError::RouteConflict`.
#[derive(Default)]
pub struct RouteGroups {
    pub product: Router<AppState>,
    pub cart: Router<AppState>,
    pub customer: Router<AppState>,
    pub payment: Router<AppState>,
    pub order: Router<AppState>,
    pub qrcode: Router<AppState>,
    pub employee: Router<AppState>,
    pub admin: Router<AppState>,
}

/// route_table
///
/// The standard table:
///
/// | prefix | tier |
/// |---|---|
/// | `/api/product`, `/api/cart`, `/api/customer`, `/api/payment`, `/api/order`, `/api/qrcode` | public |
/// | `/api/employee` | admin, associate, cashier; `POST /login` public |
/// | `/api/admin` | admin |
pub fn route_table(groups: RouteGroups) -> Result<RouteTable, RouteTableError> {
    let employee = merge_checked("/api/employee", employee::employee_routes(), groups.employee)?;
    let admin = merge_checked("/api/admin", admin::admin_routes(), groups.admin)?;

    Ok(RouteTable::new()
        .public("/api/product", groups.product)
        .public("/api/cart", groups.cart)
        .public("/api/customer", groups.customer)
        .public("/api/payment", groups.payment)
        .public("/api/order", groups.order)
        .public("/api/qrcode", groups.qrcode)
        .protected_except("/api/employee", STAFF_ROLES, employee::login_routes(), employee)
        .protected("/api/admin", ADMIN_ROLES, admin))
}
