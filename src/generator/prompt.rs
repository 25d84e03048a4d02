use crate::config::PitchConfig;
use crate::generator::MessageStage;

pub fn system_prompt(pitch: &PitchConfig) -> String {
    format!(
        "You are an expert SaaS sales representative for {product}, {summary}. \
Craft concise, value-centric outreach messages that resonate with {audience}. \
Highlight efficiency and ease-of-use.",
        product = pitch.product,
        summary = pitch.summary,
        audience = pitch.audience,
    )
}

pub fn user_prompt(stage: MessageStage, profile_name: &str, pitch: &PitchConfig) -> String {
    let product = &pitch.product;
    match stage {
        MessageStage::Sales => format!(
            "Compose a friendly yet professional LinkedIn connection request \
(max 300 characters) tailored to {profile_name}, a solo {specialty}. \
Focus on the key pain points: administrative burden, software costs, and \
record management. Close with a low-pressure call-to-action to explore {product}.",
            specialty = pitch.specialty,
        ),
        MessageStage::Discovery => format!(
            "Start a discovery conversation with {profile_name}. Ask 1-2 concise \
questions to understand their current workflow, top pain points, and budget. \
Keep it friendly and consultative; no selling yet."
        ),
        MessageStage::Presentation => format!(
            "Send a short LinkedIn message to {profile_name} summarizing the 3 key \
features of {product} that solve their solo-practice challenges. Offer a quick demo link."
        ),
        MessageStage::Objection => format!(
            "{profile_name} is hesitant about switching to {product} due to cost and data \
migration. Craft a reassuring response addressing affordability plans and white-glove \
migration assistance."
        ),
        MessageStage::Closing => format!(
            "Politely ask {profile_name} if they'd be open to starting a 14-day free trial \
of {product} next week. Include the link to Sign Up: {signup_url}",
            signup_url = pitch.signup_url,
        ),
    }
}
