pub mod csv;
pub mod excel;
pub mod html_table;
pub mod json;
pub mod text;
pub mod xml;

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;

use crate::error::Error;

/// Options of every upload route arrive in the query string.
pub type Options<T> = Result<Query<T>, QueryRejection>;

pub fn options<T>(query: Options<T>) -> Result<T, Error> {
    Ok(query?.0)
}
