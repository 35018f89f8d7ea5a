//! Spanish prompts for the enrichment calls.

use crate::models::Program;
use crate::services::Country;

use super::ChatPrompt;

fn prompt(system: &str, user: String, max_tokens: u32, temperature: f32) -> ChatPrompt {
    ChatPrompt {
        system: system.to_string(),
        user,
        max_tokens,
        temperature,
    }
}

pub fn summary(lineas: &str) -> ChatPrompt {
    prompt(
        "Eres un asistente académico especializado en resumir líneas de investigación científica de manera concisa y profesional.",
        format!(
            "Resume las siguientes líneas de investigación en un párrafo breve, destacando los aspectos más importantes y potenciales aplicaciones: {}",
            lineas
        ),
        200,
        0.7,
    )
}

pub fn stats(universidad: &str, programas: &[Program]) -> ChatPrompt {
    let programas_texto = programas
        .iter()
        .map(|p| format!("{}: {}", p.programa, p.lineas_investigacion.join(". ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    prompt(
        "Eres un analista de datos académicos que evalúa programas de doctorado y genera estadísticas cualitativas.",
        format!(
            r#"Basándote en la siguiente información de programas de doctorado de {universidad}, genera 5 métricas numéricas en escala del 1 al 10 para evaluar:
1. Innovación: cuán innovadores son los temas de investigación
2. Interdisciplinariedad: nivel de colaboración entre disciplinas
3. Impacto potencial: posible impacto en la sociedad/industria
4. Competitividad internacional: posicionamiento internacional
5. Aplicabilidad: orientación práctica vs. teórica

Programas y líneas de investigación:
{programas_texto}

Responde SOLO con un objeto JSON con este formato exacto:
{{"innovacion": N, "interdisciplinariedad": N, "impacto": N, "internacional": N, "aplicabilidad": N}}
donde N es un número del 1 al 10."#
        ),
        150,
        0.7,
    )
}

pub fn costo_vida(ciudad: &str, country: Country) -> ChatPrompt {
    let system = match country {
        Country::Portugal => "Eres un asistente especializado en economía y datos de ciudades portuguesas.",
        Country::Spain => "Eres un asistente especializado en economía y datos de ciudades españolas.",
    };
    prompt(
        system,
        format!(
            "¿Cuál es el costo de vida aproximado en {} (sin incluir alquiler) en relación a Ciudad de México? Devuélvelo como un índice numérico 0–100, y un breve comentario.",
            ciudad
        ),
        100,
        0.5,
    )
}

pub fn distancia(ciudad: &str, capital: &str) -> ChatPrompt {
    prompt(
        "Eres un asistente especializado en geografía y cálculo de distancias.",
        format!(
            "Calcula la distancia aérea en kilómetros entre {} y {}, basándote en coordenadas. Devuélvela como número entero.",
            ciudad, capital
        ),
        50,
        0.5,
    )
}

pub fn servicio_medico(ciudad: &str, country: Country) -> ChatPrompt {
    let system = match country {
        Country::Portugal => "Eres un asistente especializado en sistemas sanitarios portugueses.",
        Country::Spain => "Eres un asistente especializado en sistemas sanitarios españoles.",
    };
    prompt(
        system,
        format!(
            "En una escala de 0 a 10, ¿qué puntuación le das a la calidad sanitaria en {}? Proporciónanos solo el número y, opcionalmente, dos frases de justificación.",
            ciudad
        ),
        100,
        0.5,
    )
}

pub fn transporte(ciudad: &str) -> ChatPrompt {
    prompt(
        "Eres un asistente especializado en infraestructura de transporte urbano.",
        format!(
            "En una escala de 0 a 10, ¿cómo calificarías la calidad de transporte público en {}? Responde con un número y una breve justificación.",
            ciudad
        ),
        100,
        0.5,
    )
}

pub fn aire(ciudad: &str) -> ChatPrompt {
    prompt(
        "Eres un asistente especializado en calidad medioambiental urbana.",
        format!(
            "En una escala de 0 a 10, ¿cómo calificarías la calidad del aire en {}? Solo el número y, opcionalmente, una frase justificando.",
            ciudad
        ),
        100,
        0.5,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProgram;

    #[test]
    fn country_changes_system_prompt() {
        let es = costo_vida("Sevilla", Country::Spain);
        let pt = costo_vida("Porto", Country::Portugal);
        assert!(es.system.contains("españolas"));
        assert!(pt.system.contains("portuguesas"));
        assert!(pt.user.contains("Porto"));
    }

    #[test]
    fn stats_prompt_lists_programs() {
        let program = NewProgram::new("Universidad de Granada", "Granada", "Física")
            .with_lines("Óptica\n\nAstrofísica")
            .into_program()
            .unwrap();
        let prompt = stats("Universidad de Granada", &[program]);
        assert!(prompt.user.contains("Física: Óptica. Astrofísica"));
        assert!(prompt.user.contains(r#"{"innovacion": N"#));
        assert_eq!(prompt.max_tokens, 150);
    }
}
