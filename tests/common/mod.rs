#![allow(dead_code)]

pub mod temp_files {
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Scratch directory holding spec documents; removed on drop
    pub struct SpecDir {
        dir: TempDir,
    }

    impl SpecDir {
        pub fn new() -> Self {
            SpecDir {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        /// Write `content` to `name` (parents created) and return the path
        pub fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }

        /// Like [`SpecDir::write`], returning the path as the `source` string
        pub fn source(&self, name: &str, content: &str) -> String {
            self.write(name, content).to_string_lossy().to_string()
        }
    }
}

pub mod mock_server {
    use std::collections::HashMap;
    use std::thread;
    use std::time::Duration;

    /// Serve fixed documents over HTTP on an ephemeral port
    ///
    /// Unknown paths answer 404. A path listed in `slow` is answered only after
    /// `delay`. The server thread lives until the test process exits.
    pub fn serve(documents: &[(&str, &str)], slow: &[&str], delay: Duration) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let documents: HashMap<String, String> = documents
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect();
        let slow: Vec<String> = slow.iter().map(|s| s.to_string()).collect();

        thread::spawn(move || {
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                if slow.contains(&path) {
                    thread::sleep(delay);
                }
                let response = match documents.get(&path) {
                    Some(body) => tiny_http::Response::from_string(body.clone()).with_status_code(200),
                    None => tiny_http::Response::from_string("not found").with_status_code(404),
                };
                if let Err(e) = request.respond(response) {
                    eprintln!("mock server failed to respond to {path}: {e}");
                }
            }
        });
        format!("http://{addr}")
    }

    pub fn serve_documents(documents: &[(&str, &str)]) -> String {
        serve(documents, &[], Duration::ZERO)
    }
}

pub mod fixtures {
    /// One schema, one endpoint guarded by the standard scheme
    pub const WIDGET_API: &str = r#"openapi: 3.1.0
info:
  title: Widget API
  version: "1.0.0"
components:
  securitySchemes:
    apiKey:
      type: apiKey
      in: header
      name: X-API-Key
  schemas:
    Widget:
      type: object
      required: [id]
      properties:
        id: {type: string}
        name: {type: string}
paths:
  /widgets/{id}:
    get:
      operationId: getWidget
      security:
        - apiKey: []
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: string}
      responses:
        "200":
          description: the widget
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Widget'
"#;

    /// Standard and elevated schemes, lifted inline objects, composition
    pub const INVENTORY_API: &str = r#"openapi: 3.0.3
info:
  title: Inventory Service
  version: "2.1.0"
  description: Stock levels and suppliers
servers:
  - url: https://inventory.example.com/api
components:
  securitySchemes:
    userKey:
      type: apiKey
      in: header
      name: X-User-Key
    opsToken:
      type: http
      scheme: bearer
      x-elevated: true
  schemas:
    Entity:
      type: object
      required: [id]
      properties:
        id: {type: integer, format: int64}
        created_at: {type: string, format: date-time}
    Supplier:
      allOf:
        - $ref: '#/components/schemas/Entity'
        - type: object
          required: [name]
          properties:
            name: {type: string, maxLength: 120}
            contact:
              type: object
              properties:
                email: {type: string, format: email}
                phone: {type: string}
    Item:
      type: object
      required: [sku, quantity]
      properties:
        sku: {type: string, x-primary-key: true}
        quantity: {type: integer, minimum: 0}
        status:
          type: string
          enum: [active, retired]
        supplier:
          $ref: '#/components/schemas/Supplier'
        tags:
          type: array
          items: {type: string}
security:
  - userKey: []
paths:
  /items:
    get:
      operationId: listItems
      tags: [items]
      parameters:
        - name: limit
          in: query
          schema: {type: integer, default: 20}
      responses:
        "200":
          description: items
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Item'
    post:
      operationId: createItem
      tags: [items]
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Item'
      responses:
        "201":
          description: created
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Item'
        "409":
          description: duplicate sku
  /items/{sku}:
    delete:
      operationId: retireItem
      security:
        - opsToken: []
      parameters:
        - name: sku
          in: path
          required: true
          schema: {type: string}
      responses:
        "204":
          description: retired
  /suppliers/{id}/restock:
    post:
      operationId: restockSupplier
      security:
        - opsToken: []
        - userKey: []
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: integer}
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [quantity]
              properties:
                quantity: {type: integer}
      responses:
        "202":
          description: accepted
  /status:
    get:
      operationId: status
      security: []
      responses:
        "200":
          description: up
"#;
}
