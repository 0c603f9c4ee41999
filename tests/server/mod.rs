use actix_web::{App, HttpResponse, HttpServer, web};
use serde_json::json;

/// Serves one day of metrics per `GET /{repo}/{date}`. Days in `missing`
/// answer 404 and days in `broken` answer 500; every other day reports
/// `clicks(date)` for both the site total and `/blog/launch`.
#[allow(dead_code)]
pub async fn start_metrics_server(missing: Vec<String>, broken: Vec<String>, clicks: fn(&str) -> f64) -> String {
    let http_server = HttpServer::new(move || {
        let missing = missing.clone();
        let broken = broken.clone();
        App::new().route(
            "/{repo}/{date}",
            web::get().to(move |path: web::Path<(String, String)>| {
                let missing = missing.clone();
                let broken = broken.clone();
                async move {
                    let (_repo, date) = path.into_inner();
                    if missing.contains(&date) {
                        return HttpResponse::NotFound().body("Not Found");
                    }
                    if broken.contains(&date) {
                        return HttpResponse::InternalServerError().body("Error");
                    }
                    let value = clicks(&date);
                    HttpResponse::Ok().json(json!({
                        "date": date,
                        "total_clicks": value,
                        "pages": [{ "page": "https://acme.dev/blog/launch", "clicks": value }]
                    }))
                }
            }),
        )
    })
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind test server");

    let addr = http_server.addrs().first().cloned().expect("No address bound");
    let url = format!("http://{}", addr);

    let app_server = http_server.run();

    tokio::spawn(async move {
        if let Err(e) = app_server.await {
            eprintln!("Test server error: {}", e);
        }
    });

    url
}
