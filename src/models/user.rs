use subtle::ConstantTimeEq;

/// A dashboard login. The directory is static; there is no user database.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub email: &'static str,
    password: &'static str,
    pub role: &'static str,
}

const USERS: &[User] = &[
    User {
        email: "admin@rapyder.com",
        password: "admin123",
        role: "admin",
    },
    User {
        email: "user@rapyder.com",
        password: "user123",
        role: "user",
    },
];

/// Look up a user by email and verify the password in constant time.
pub fn check_credentials(email: &str, password: &str) -> Option<&'static User> {
    let user = USERS.iter().find(|u| u.email == email)?;
    if user.password.as_bytes().ct_eq(password.as_bytes()).into() {
        Some(user)
    } else {
        None
    }
}
