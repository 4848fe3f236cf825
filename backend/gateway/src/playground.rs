//! GraphiQL explorer, served from a CDN build pointed at `/graphql`.

use axum::response::Html;

const GRAPHIQL_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>pagegraph</title>
  <style>body { margin: 0; height: 100vh; } #graphiql { height: 100vh; }</style>
  <link rel="stylesheet" href="https://unpkg.com/graphiql@3/graphiql.min.css" />
</head>
<body>
  <div id="graphiql">Loading...</div>
  <script crossorigin src="https://unpkg.com/react@18/umd/react.production.min.js"></script>
  <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.production.min.js"></script>
  <script crossorigin src="https://unpkg.com/graphiql@3/graphiql.min.js"></script>
  <script>
    const fetcher = GraphiQL.createFetcher({ url: "/graphql" });
    const defaultQuery = `{
  page(url: "https://example.com/") {
    title
    links: query(selector: "a") {
      text
      href: attr(name: "href")
    }
  }
}
`;
    ReactDOM.createRoot(document.getElementById("graphiql")).render(
      React.createElement(GraphiQL, { fetcher, defaultQuery })
    );
  </script>
</body>
</html>
"#;

/// Handler for `GET /` and query-less `GET /graphql`.
pub async fn graphiql() -> Html<&'static str> {
    Html(GRAPHIQL_HTML)
}
