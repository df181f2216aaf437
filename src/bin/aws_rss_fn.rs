use blog_sync::{
    aws::S3Bucket, client::Client, client::FeedSource, config, dao::Dao, podcast, util, Config,
};
use lambda_runtime::{handler_fn, Context, Error};
use serde::{Deserialize, Serialize};
use simple_error::SimpleResult;

#[derive(Deserialize, Default)]
#[serde(default)]
struct Request {
    bucket: Option<String>,
    db_key: Option<String>,
    rss_url: Option<String>,
    region: Option<String>,
}

#[derive(Serialize)]
struct Response {
    request_id: String,
    count: usize,
    updated: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _lg = util::init_log("info")?;

    lambda_runtime::run(handler_fn(reload_rss)).await?;
    Ok(())
}

async fn reload_rss(
    Request {
        bucket,
        db_key,
        rss_url,
        region,
    }: Request,
    ctx: Context,
) -> SimpleResult<Response> {
    let defaults = Config::default();
    let bucket = bucket.unwrap_or(defaults.bucket);
    let db_key = db_key.unwrap_or(defaults.db_key);
    let region = region.unwrap_or(defaults.region);
    let source = FeedSource::Url(rss_url.unwrap_or_else(|| config::DEFAULT_FEED_URL.to_string()));
    log::info!("reloading {:?} into s3://{}/{}", source, bucket, db_key);

    let dao = Dao::new(S3Bucket::from_region_name(&region, &bucket), &db_key);
    let updated = podcast::update_podcast_rss(&dao, &Client::default(), &source, &defaults.domains)
        .await
        .map_err(util::to_simple)?;

    Ok(Response {
        request_id: ctx.request_id,
        count: updated.len(),
        updated,
    })
}
