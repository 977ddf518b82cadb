pub(crate) mod answers;
pub(crate) mod assignments;
pub(crate) mod courses;
pub(crate) mod health;
pub(crate) mod reports;
pub(crate) mod submissions;
pub(crate) mod users;
