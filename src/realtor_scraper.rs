use crate::models::AgentRecord;
use anyhow::Result;
use log::warn;
use scraper::{ElementRef, Html, Selector};

pub const BASE_URL: &str = "https://www.realtor.com/realestateagents";

pub fn page_url(postal_code: &str, page: usize) -> String {
    format!(
        "{}/{}/pg-{}",
        BASE_URL,
        urlencoding::encode(postal_code),
        page
    )
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Failed to parse selector {}: {:?}", css, e))
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub fn extract_agents(html: &str, postal_code: &str) -> Result<Vec<AgentRecord>> {
    let document = Html::parse_document(html);

    let card_selector = selector("div.jsx-3873707352.card-details")?;
    let name_selector = selector("span.jsx-3873707352.text-bold")?;
    let phone_icon_selector = selector("span.jsx-3873707352.phone-icon")?;
    let phone_selector = selector("div.jsx-3873707352.agent-phone.hidden-xs.hidden-xxs")?;

    let mut agents = Vec::new();

    for card in document.select(&card_selector) {
        let name = match card.select(&name_selector).next() {
            Some(element) => element_text(element),
            None => {
                warn!("Skipping agent card without a name for zip code {}", postal_code);
                continue;
            }
        };

        // The phone number only exists nested inside the phone icon span
        let phone = card
            .select(&phone_icon_selector)
            .next()
            .and_then(|icon| icon.select(&phone_selector).next())
            .map(element_text);

        agents.push(AgentRecord::new(name, phone, postal_code));
    }

    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="jsx-3873707352 card-details">
            <span class="jsx-3873707352 text-bold"> Jane Doe </span>
            <span class="jsx-3873707352 phone-icon">
              <div class="jsx-3873707352 agent-phone hidden-xs hidden-xxs"> (406) 555-0101 </div>
            </span>
          </div>
          <div class="jsx-3873707352 card-details">
            <span class="jsx-3873707352 text-bold">John Roe</span>
          </div>
          <div class="jsx-3873707352 card-details">
            <span class="jsx-3873707352 text-bold">Ann Poe</span>
            <span class="jsx-3873707352 phone-icon"></span>
          </div>
          <div class="jsx-3873707352 card-details">
            <span class="jsx-3873707352 phone-icon">
              <div class="jsx-3873707352 agent-phone hidden-xs hidden-xxs">555</div>
            </span>
          </div>
        </body></html>
    "#;

    #[test]
    fn builds_paginated_urls() {
        assert_eq!(
            page_url("59801", 3),
            "https://www.realtor.com/realestateagents/59801/pg-3"
        );
        assert_eq!(
            page_url("K1A 0B1", 1),
            "https://www.realtor.com/realestateagents/K1A%200B1/pg-1"
        );
    }

    #[test]
    fn extracts_names_and_optional_phones() {
        let agents = extract_agents(PAGE, "59801").unwrap();
        assert_eq!(
            agents,
            vec![
                AgentRecord::new("Jane Doe", Some("(406) 555-0101".to_string()), "59801"),
                AgentRecord::new("John Roe", None, "59801"),
                AgentRecord::new("Ann Poe", None, "59801"),
            ]
        );
    }

    #[test]
    fn page_without_cards_is_empty() {
        let agents = extract_agents("<html><body><p>No agents</p></body></html>", "59801").unwrap();
        assert!(agents.is_empty());
    }
}
