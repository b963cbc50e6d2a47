use crate::error::BotError;
use crate::services::ensure_success;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animal {
    Cat,
    Dog,
}

#[derive(Deserialize)]
struct CatImage {
    url: String,
}

#[derive(Deserialize)]
struct DogImage {
    message: String,
}

pub struct AnimalService {
    client: reqwest::Client,
}

impl AnimalService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// URL of a random picture.
    pub async fn random_image(&self, animal: Animal) -> Result<String, BotError> {
        match animal {
            Animal::Cat => {
                let response = self
                    .client
                    .get("https://api.thecatapi.com/v1/images/search")
                    .send()
                    .await?;
                let images: Vec<CatImage> = ensure_success("thecatapi", response)?.json().await?;
                images
                    .into_iter()
                    .next()
                    .map(|i| i.url)
                    .ok_or_else(|| BotError::Upstream("thecatapi returned no images".into()))
            }
            Animal::Dog => {
                let response = self
                    .client
                    .get("https://dog.ceo/api/breeds/image/random")
                    .send()
                    .await?;
                let image: DogImage = ensure_success("dog.ceo", response)?.json().await?;
                Ok(image.message)
            }
        }
    }
}
