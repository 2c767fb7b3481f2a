use crate::{
    api::{
        asset, assignment, attendance, attendance_record, breaks, dashboard, employee, flowace,
        issue, tag, upload, warning, work_log,
    },
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP rate limiters. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct Limiters {
    api: Limiter,
    upload: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("invalid rate limit settings")?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            api: build_limiter(config.rate_api_per_min)?,
            upload: build_limiter(config.rate_upload_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    let uploads = &limiters.upload;

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.api.clone())
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/records")
                            .route(web::get().to(attendance_record::list_records))
                            .route(web::post().to(attendance_record::create_record)),
                    )
                    .service(
                        web::resource("/records/{id}")
                            .route(web::get().to(attendance_record::get_record))
                            .route(web::put().to(attendance_record::update_record))
                            .route(web::delete().to(attendance_record::delete_record)),
                    )
                    .service(
                        web::resource("/upload/srp")
                            .wrap(uploads.clone())
                            .route(web::post().to(attendance_record::upload_srp)),
                    )
                    .service(
                        web::resource("/upload/csv")
                            .wrap(uploads.clone())
                            .route(web::post().to(attendance_record::upload_csv)),
                    ),
            )
            .service(
                web::scope("/breaks")
                    .service(web::resource("").route(web::get().to(breaks::list_breaks)))
                    .service(web::resource("/start").route(web::post().to(breaks::start_break)))
                    .service(web::resource("/end").route(web::post().to(breaks::end_break)))
                    .service(web::resource("/summary").route(web::get().to(breaks::break_summary))),
            )
            .service(
                web::scope("/tags")
                    .service(
                        web::resource("")
                            .route(web::post().to(tag::create_tag))
                            .route(web::get().to(tag::list_tags)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(tag::get_tag))
                            .route(web::put().to(tag::update_tag))
                            .route(web::delete().to(tag::delete_tag)),
                    ),
            )
            .service(
                web::scope("/assignments")
                    .service(
                        web::resource("")
                            .route(web::post().to(assignment::assign_tags))
                            .route(web::get().to(assignment::list_assignments)),
                    )
                    .service(
                        web::resource("/{id}").route(web::delete().to(assignment::delete_assignment)),
                    ),
            )
            .service(
                web::scope("/logs")
                    .service(
                        web::resource("")
                            .route(web::post().to(work_log::submit_logs))
                            .route(web::get().to(work_log::list_logs)),
                    )
                    // ahead of /{id} so "summary" is not taken for an id
                    .service(web::resource("/summary").route(web::get().to(work_log::log_summary)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(work_log::update_log))
                            .route(web::delete().to(work_log::delete_log)),
                    ),
            )
            .service(
                web::scope("/issues")
                    .service(
                        web::resource("")
                            .route(web::post().to(issue::create_issue))
                            .route(web::get().to(issue::list_issues)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(issue::get_issue)))
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(issue::update_issue_status)),
                    ),
            )
            .service(
                web::scope("/warnings")
                    .service(
                        web::resource("")
                            .route(web::post().to(warning::create_warning))
                            .route(web::get().to(warning::list_warnings)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(warning::get_warning)))
                    .service(
                        web::resource("/{id}/dismiss").route(web::put().to(warning::dismiss_warning)),
                    ),
            )
            .service(
                web::scope("/assets")
                    .service(
                        web::resource("")
                            .route(web::post().to(asset::create_asset))
                            .route(web::get().to(asset::list_assets)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(asset::get_asset))
                            .route(web::put().to(asset::update_asset))
                            .route(web::delete().to(asset::delete_asset)),
                    )
                    .service(web::resource("/{id}/assign").route(web::post().to(asset::assign_asset)))
                    .service(web::resource("/{id}/return").route(web::post().to(asset::return_asset)))
                    .service(
                        web::resource("/{id}/history").route(web::get().to(asset::asset_history)),
                    ),
            )
            .service(
                web::resource("/asset-assignments")
                    .route(web::get().to(asset::list_asset_assignments)),
            )
            .service(
                web::scope("/flowace")
                    .service(web::resource("").route(web::get().to(flowace::list_flowace)))
                    .service(
                        web::resource("/upload")
                            .wrap(uploads.clone())
                            .route(web::post().to(flowace::upload_flowace)),
                    )
                    .service(
                        web::resource("/reconcile").route(web::post().to(flowace::reconcile_flowace)),
                    )
                    .service(
                        web::resource("/{id}/match").route(web::put().to(flowace::match_flowace)),
                    ),
            )
            .service(
                web::scope("/uploads")
                    .service(web::resource("").route(web::get().to(upload::list_uploads)))
                    .service(web::resource("/{id}").route(web::get().to(upload::get_upload))),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/summary").route(web::get().to(dashboard::summary)))
                    .service(web::resource("/me").route(web::get().to(dashboard::my_dashboard))),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, json_body};
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    macro_rules! app {
        () => {{
            let config = Config::for_tests();
            let limiters = Limiters::from_config(&config).unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(config.clone()))
                    .configure(|cfg| configure(cfg, &config, &limiters)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn api_scope_requires_a_token() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/employees")
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing token");
    }

    #[actix_web::test]
    async fn log_summary_is_not_read_as_an_id() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/logs/summary?from=2026-02-10&to=2026-02-01")
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .insert_header(bearer(Role::Admin, None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["details"][0]["field"], "to");
    }

    #[core::prelude::v1::test]
    fn zero_rate_still_builds_a_limiter() {
        let mut config = Config::for_tests();
        config.rate_api_per_min = 0;
        assert!(Limiters::from_config(&config).is_ok());
    }
}
