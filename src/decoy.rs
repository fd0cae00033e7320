//! Embedded decoy page (§1: external collaborator). Served at `/` so a
//! passive scan of the relay's root path sees an innocuous static page
//! instead of an API surface.

pub const DECOY_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>4x4 Sudoku Enumeration Notes</title>
</head>
<body>
  <h1>4x4 Sudoku Enumeration Notes</h1>
  <p>
    There are exactly 288 distinct solved 4x4 Sudoku grids (rows, columns,
    and 2x2 boxes each containing 1-4 exactly once), a fact that falls out
    of straightforward backtracking enumeration rather than a closed-form
    count.
  </p>
  <p>
    This page hosts working notes and raw dataset dumps from that
    enumeration for internal reference.
  </p>
</body>
</html>
"#;

pub async fn serve() -> axum::response::Html<&'static str> {
    axum::response::Html(DECOY_HTML)
}
